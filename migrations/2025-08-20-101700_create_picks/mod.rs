use barrel::{Migration, Table, types};

/// Handle up migrations
fn up(m: &mut Migration) {
    m.create_table("picks", |t: &mut Table| {
        t.inject_custom("id uuid primary key default gen_random_uuid() not null unique");
        t.add_column("user_id", types::text().nullable(false));
        t.add_column("game_id", types::text().nullable(false));
        t.add_column("week", types::integer().nullable(false));
        t.add_column("picked_team", types::text().nullable(false));
        t.add_column("is_correct", types::boolean().nullable(true));
        t.inject_custom("created_at timestamptz default now() not null");
        t.inject_custom("updated_at timestamptz default now() not null");
        t.inject_custom("constraint picks_user_id_fkey foreign key (user_id) references users(id)");
        t.inject_custom("constraint picks_game_id_fkey foreign key (game_id) references games(id)");
        t.inject_custom("constraint picks_user_game_key unique (user_id, game_id)");
    });
    m.inject_custom("create index picks_week_idx on picks(week)");
}

/// Handle down migrations
fn down(m: &mut Migration) {
    m.drop_table("picks");
}

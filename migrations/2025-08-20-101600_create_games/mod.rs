use barrel::{Migration, Table, types};

/// Handle up migrations
fn up(m: &mut Migration) {
    m.create_table("games", |t: &mut Table| {
        t.inject_custom("id text primary key not null");
        t.add_column("week", types::integer().nullable(false));
        t.inject_custom("scheduled timestamptz not null");
        t.add_column("home_team", types::text().nullable(false));
        t.add_column("away_team", types::text().nullable(false));
        t.add_column("winner_team", types::text().nullable(true));
        t.add_column("status", types::text().nullable(false).default("scheduled"));
        t.inject_custom("created_at timestamptz default now() not null");
        t.inject_custom("updated_at timestamptz default now() not null");
    });
    m.inject_custom("create index games_week_idx on games(week)");
}

/// Handle down migrations
fn down(m: &mut Migration) {
    m.drop_table("games");
}

use barrel::{Migration, Table, types};

/// Handle up migrations
fn up(m: &mut Migration) {
    m.create_table("users", |t: &mut Table| {
        t.inject_custom("id text primary key not null");
        t.add_column("username", types::text().nullable(false));
        t.add_column("is_admin", types::boolean().nullable(false).default(false));
        t.inject_custom("created_at timestamptz default now() not null");
        t.inject_custom("updated_at timestamptz default now() not null");
    });
}

/// Handle down migrations
fn down(m: &mut Migration) {
    m.drop_table("users");
}

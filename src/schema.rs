table! {
    games (id) {
        id -> Text,
        week -> Int4,
        scheduled -> Timestamptz,
        home_team -> Text,
        away_team -> Text,
        winner_team -> Nullable<Text>,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    picks (id) {
        id -> Uuid,
        user_id -> Text,
        game_id -> Text,
        week -> Int4,
        picked_team -> Text,
        is_correct -> Nullable<Bool>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    users (id) {
        id -> Text,
        username -> Text,
        is_admin -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

joinable!(picks -> games (game_id));
joinable!(picks -> users (user_id));

allow_tables_to_appear_in_same_query!(games, picks, users,);

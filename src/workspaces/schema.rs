diesel::table! {
    workspaces (id) {
        id -> Integer,
        name -> Text,
        created_at -> BigInt,
    }
}

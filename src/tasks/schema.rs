diesel::table! {
    tasks (id) {
        id -> Integer,
        title -> Text,
        emoji -> Nullable<Text>,
        completed -> Bool,
        favorite -> Bool,
        deleted -> Bool,
        category -> Text,
        workspace_id -> Nullable<Integer>,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    goals (id) {
        id -> Integer,
        title -> Text,
        emoji -> Nullable<Text>,
        completed -> Bool,
        favorite -> Bool,
        deleted -> Bool,
        category -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

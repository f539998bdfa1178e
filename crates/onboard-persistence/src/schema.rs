// Esquema Diesel compartido por SQLite y Postgres.
// Tablas: runs, member_events, sequences, members
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    runs (id) {
        id -> Text,
        user_id -> Text,
        contact_address -> Text,
        steps_remaining -> Text,
        total_steps -> BigInt,
        next_step_index -> BigInt,
        last_completed_day -> BigInt,
        cursor_day -> BigInt,
        attempt -> BigInt,
        sequence_hash -> Text,
        started_at_ts -> BigInt,
        resume_at_ts -> BigInt,
        status -> Text,
        version -> BigInt,
        updated_at_ts -> BigInt,
    }
}
diesel::table! {
    member_events (id) {
        id -> Text,
        run_id -> Text,
        user_id -> Text,
        event_type -> Text,
        command_id -> Text,
        payload -> Text,
        seq_no -> BigInt,
        created_at_ts -> BigInt,
    }
}
diesel::table! {
    sequences (user_id) {
        user_id -> Text,
        content -> Text,
        content_hash -> Text,
        active -> Bool,
        updated_at_ts -> BigInt,
    }
}
diesel::table! {
    members (user_id) {
        user_id -> Text,
        status -> Text,
        updated_at_ts -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(runs, member_events, sequences, members,);

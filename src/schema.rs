diesel::table! {
    reservations (id) {
        id -> Uuid,
        date -> Date,
        start_time -> Time,
        end_time -> Time,
        name -> Text,
        menu -> Text,
        owner -> Nullable<Uuid>,
    }
}

diesel::table! {
    unavailable_days (date) {
        date -> Date,
    }
}

diesel::table! {
    unavailable_times (date, time) {
        date -> Date,
        time -> Time,
    }
}

diesel::allow_tables_to_appear_in_same_query!(reservations, unavailable_days, unavailable_times,);

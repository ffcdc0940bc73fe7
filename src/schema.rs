// Kept in sync with src/repository/schema_sqlite.sql by hand.

diesel::table! {
    categories (category_id) {
        category_id -> BigInt,
        name -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    lots (id) {
        id -> BigInt,
        category_id -> BigInt,
        category_name -> Text,
        title -> Text,
        normalized_title -> Text,
        description -> Text,
        normalized_description -> Text,
        begin_date -> Nullable<Text>,
        end_date -> Nullable<Text>,
        price -> Double,
        start_price -> Double,
        final_price -> Nullable<Double>,
        year_published -> Nullable<Integer>,
        seller_name -> Nullable<Text>,
        city -> Nullable<Text>,
        lot_type -> Integer,
        status -> Integer,
        sold_quantity -> BigInt,
        bids_count -> BigInt,
        pics_count -> BigInt,
        image_urls -> Text,
        thumbnail_urls -> Text,
        pics_ratio -> Text,
        is_monitored -> Bool,
        is_less_valuable -> Bool,
        is_images_compressed -> Bool,
        image_archive_url -> Nullable<Text>,
        archived_at -> Nullable<Text>,
        first_seen_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(lots -> categories (category_id));

diesel::allow_tables_to_appear_in_same_query!(categories, lots);

//! Diesel row types for the `lots` and `categories` tables.

use chrono::Utc;
use diesel::prelude::*;

use super::{format_datetime, parse_datetime, parse_datetime_opt, RepositoryError};
use crate::models::{Category, Lot, LotStatus, LotType};
use crate::schema;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::categories)]
#[diesel(primary_key(category_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryRecord {
    pub category_id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::categories)]
pub struct NewCategory<'a> {
    pub category_id: i64,
    pub name: &'a str,
    pub created_at: &'a str,
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category::new(record.category_id, record.name)
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::lots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LotRecord {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub title: String,
    pub normalized_title: String,
    pub description: String,
    pub normalized_description: String,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub price: f64,
    pub start_price: f64,
    pub final_price: Option<f64>,
    pub year_published: Option<i32>,
    pub seller_name: Option<String>,
    pub city: Option<String>,
    pub lot_type: i32,
    pub status: i32,
    pub sold_quantity: i64,
    pub bids_count: i64,
    pub pics_count: i64,
    pub image_urls: String,
    pub thumbnail_urls: String,
    pub pics_ratio: String,
    pub is_monitored: bool,
    pub is_less_valuable: bool,
    pub is_images_compressed: bool,
    pub image_archive_url: Option<String>,
    pub archived_at: Option<String>,
    pub first_seen_at: String,
    pub updated_at: String,
}

impl From<LotRecord> for Lot {
    fn from(record: LotRecord) -> Self {
        Lot {
            id: record.id,
            category_id: record.category_id,
            category_name: record.category_name,
            title: record.title,
            normalized_title: record.normalized_title,
            description: record.description,
            normalized_description: record.normalized_description,
            begin_date: parse_datetime_opt(record.begin_date),
            end_date: parse_datetime_opt(record.end_date),
            price: record.price,
            start_price: record.start_price,
            final_price: record.final_price,
            year_published: record.year_published,
            seller_name: record.seller_name,
            city: record.city,
            lot_type: LotType::from(record.lot_type),
            status: LotStatus::from(record.status),
            sold_quantity: record.sold_quantity,
            bids_count: record.bids_count,
            pics_count: record.pics_count,
            image_urls: serde_json::from_str(&record.image_urls).unwrap_or_default(),
            thumbnail_urls: serde_json::from_str(&record.thumbnail_urls).unwrap_or_default(),
            pics_ratio: serde_json::from_str(&record.pics_ratio).unwrap_or_default(),
            is_monitored: record.is_monitored,
            is_less_valuable: record.is_less_valuable,
            is_images_compressed: record.is_images_compressed,
            image_archive_url: record.image_archive_url,
            archived_at: parse_datetime_opt(record.archived_at),
            first_seen_at: parse_datetime(&record.first_seen_at),
        }
    }
}

/// Owned insert row; REPLACE INTO overwrites every column.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::lots)]
pub struct NewLotRecord {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub title: String,
    pub normalized_title: String,
    pub description: String,
    pub normalized_description: String,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub price: f64,
    pub start_price: f64,
    pub final_price: Option<f64>,
    pub year_published: Option<i32>,
    pub seller_name: Option<String>,
    pub city: Option<String>,
    pub lot_type: i32,
    pub status: i32,
    pub sold_quantity: i64,
    pub bids_count: i64,
    pub pics_count: i64,
    pub image_urls: String,
    pub thumbnail_urls: String,
    pub pics_ratio: String,
    pub is_monitored: bool,
    pub is_less_valuable: bool,
    pub is_images_compressed: bool,
    pub image_archive_url: Option<String>,
    pub archived_at: Option<String>,
    pub first_seen_at: String,
    pub updated_at: String,
}

impl TryFrom<&Lot> for NewLotRecord {
    type Error = RepositoryError;

    fn try_from(lot: &Lot) -> Result<Self, Self::Error> {
        Ok(Self {
            id: lot.id,
            category_id: lot.category_id,
            category_name: lot.category_name.clone(),
            title: lot.title.clone(),
            normalized_title: lot.normalized_title.clone(),
            description: lot.description.clone(),
            normalized_description: lot.normalized_description.clone(),
            begin_date: lot.begin_date.as_ref().map(format_datetime),
            end_date: lot.end_date.as_ref().map(format_datetime),
            price: lot.price,
            start_price: lot.start_price,
            final_price: lot.final_price,
            year_published: lot.year_published,
            seller_name: lot.seller_name.clone(),
            city: lot.city.clone(),
            lot_type: lot.lot_type.code(),
            status: lot.status.code(),
            sold_quantity: lot.sold_quantity,
            bids_count: lot.bids_count,
            pics_count: lot.pics_count,
            image_urls: serde_json::to_string(&lot.image_urls)?,
            thumbnail_urls: serde_json::to_string(&lot.thumbnail_urls)?,
            pics_ratio: serde_json::to_string(&lot.pics_ratio)?,
            is_monitored: lot.is_monitored,
            is_less_valuable: lot.is_less_valuable,
            is_images_compressed: lot.is_images_compressed,
            image_archive_url: lot.image_archive_url.clone(),
            archived_at: lot.archived_at.as_ref().map(format_datetime),
            first_seen_at: format_datetime(&lot.first_seen_at),
            updated_at: format_datetime(&Utc::now()),
        })
    }
}

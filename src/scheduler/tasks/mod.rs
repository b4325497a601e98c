pub mod store_health;

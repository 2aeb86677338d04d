pub mod app;
pub mod error;
pub mod identity;
pub mod api {
    pub mod load;
    pub mod save;
}
pub mod db {
    pub mod models;
    pub mod store;
}

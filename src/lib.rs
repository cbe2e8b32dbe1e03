pub mod error;
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod repository;
}
pub mod content {
    pub mod collections;
    pub mod hierarchy;
    pub mod service;
    pub mod slug;
}

#[cfg(feature = "server")]
pub mod app;
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod api {
    pub mod documents;
    pub mod errors;
}

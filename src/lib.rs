pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod blob;
    pub mod rated_image;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod memory;
    pub mod rated_image;
    pub mod session;
    pub mod user;
}

pub mod storage {
    pub mod blob;
    pub mod memory;
    pub mod postgres;
}

pub mod services {
    pub mod auth;
    pub mod download;
    pub mod upload;
}

pub mod handlers {
    pub mod auth;
    pub mod images;
    pub mod user;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
    pub mod filename;
}

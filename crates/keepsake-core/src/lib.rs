pub mod carousel;
pub mod chat;
pub mod config;
pub mod gallery;
pub mod platform;
pub mod playlist;
pub mod preferences;
pub mod scroll;
pub mod storage;
pub mod verse;

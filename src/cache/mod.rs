mod db;

pub use db::Cache;

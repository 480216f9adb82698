pub mod database;
pub mod protection;

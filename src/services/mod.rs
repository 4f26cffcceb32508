pub mod openweather;
pub mod request_log;

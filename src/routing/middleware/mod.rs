pub mod geoblock;
pub mod remote_addr;
pub mod request_id;

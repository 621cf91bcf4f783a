mod geoblock_test;
mod proxy_test;

pub mod devmem;

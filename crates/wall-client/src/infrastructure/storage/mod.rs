pub mod port_file;

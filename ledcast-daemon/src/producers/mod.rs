pub mod socket_server;

pub mod axis;
pub mod config;
pub mod coordinator;
pub mod ephemeris;
pub mod motor_controller;
pub mod protocol;
pub mod sim;
pub mod socket_server;
pub mod status;
pub mod thermal;
pub mod tracking;

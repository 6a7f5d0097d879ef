//! Payload types exchanged between master and slave.

pub mod brick;

pub mod image;

pub mod transforms;

pub mod volume;

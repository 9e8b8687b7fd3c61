//! `SeaORM` entities for the durable records the coordinator consults.

pub mod room;

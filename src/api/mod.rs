// HTTP gateway: one route per function

mod gateway;

pub use gateway::{create_router, GatewayResponse};

pub mod k8s;
pub mod projection;
pub mod resource;
pub mod views;

// Scheduled recycling of the managed service group

pub mod compose;
pub mod group;
pub mod recycler;
pub mod systemd;


pub use compose::ComposeGroup;
pub use group::{build_group, GroupController};
pub use recycler::{RecycleReport, Recycler};
pub use systemd::SystemdGroup;

#[cfg(test)]
pub use group::MockGroupController;

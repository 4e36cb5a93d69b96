// handlers/protected/notifications - The caller's notification feed
//
// A notification addressed to nobody in particular is visible to every
// user of its organization.

mod notification_list;
mod notification_read;
mod notification_read_all;

pub use notification_list::{notification_list, ListNotificationsQuery};
pub use notification_read::{notification_read, NotificationPath};
pub use notification_read_all::{notification_read_all, ReadAllResult};

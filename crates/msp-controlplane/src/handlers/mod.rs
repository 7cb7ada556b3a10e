pub mod checkin;
pub mod domain;
pub mod evidence;
pub mod provision;

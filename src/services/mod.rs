// Business logic service implementations

pub mod allow_list;
pub mod dashboard_service;
pub mod explorer;
pub mod ledger;
pub mod session_service;

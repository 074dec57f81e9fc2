pub mod resy_repo;

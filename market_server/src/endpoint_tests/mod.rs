mod handover;
mod helpers;
mod listings;
mod mocks;

pub mod game_service;
pub mod news_gate;
pub mod price_timeline;
pub mod ranking;
pub mod trading_engine;
pub mod turn_controller;

pub mod use_cases;

pub use use_cases::ask_service::AskUseCase;

pub use span::Span;

mod span;

mod article;
mod newsletter;
mod subscriber;
mod tag;
mod user;

pub use article::Article;
pub use newsletter::{Newsletter, NewsletterError};
pub use subscriber::Subscriber;
pub use tag::Tag;
pub use user::User;

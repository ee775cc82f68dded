mod newsletter_release;
mod release_endpoint;

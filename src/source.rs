mod cvs;
mod traits;

pub use cvs::CvsCheckout;
pub use traits::ContentSource;

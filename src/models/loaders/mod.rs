pub mod physio_loader;

pub use physio_loader::{
    load_bundle, load_recording, read_metadata, read_physio_rows, write_physio_rows,
};

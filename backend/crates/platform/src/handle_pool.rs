//! Round-robin Handle Pool
//!
//! A fixed set of reusable handles (HTTP clients, connections) handed out in
//! rotation. Picking the next handle is serialized by a single lock around the
//! cursor.

use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum HandlePoolError {
    #[error("handle pool must contain at least one handle")]
    Empty,
    #[error("failed to build handle: {0}")]
    Build(String),
}

#[derive(Debug)]
pub struct HandlePool<T> {
    handles: Vec<Arc<T>>,
    cursor: Mutex<usize>,
}

impl<T> HandlePool<T> {
    pub fn new(handles: Vec<T>) -> Result<Self, HandlePoolError> {
        if handles.is_empty() {
            return Err(HandlePoolError::Empty);
        }
        Ok(Self {
            handles: handles.into_iter().map(Arc::new).collect(),
            cursor: Mutex::new(0),
        })
    }

    /// Build `size` handles with `make`
    pub fn build<E: std::fmt::Display>(
        size: usize,
        mut make: impl FnMut() -> Result<T, E>,
    ) -> Result<Self, HandlePoolError> {
        let handles = (0..size)
            .map(|_| make().map_err(|e| HandlePoolError::Build(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(handles)
    }

    /// Next handle in rotation
    pub async fn next(&self) -> Arc<T> {
        let mut cursor = self.cursor.lock().await;
        let handle = self.handles[*cursor].clone();
        *cursor = (*cursor + 1) % self.handles.len();
        handle
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

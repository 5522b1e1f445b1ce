use std::any::Any;
use std::sync::Arc;

/// Opaque caller payload attached to each chain and catch buffer.
///
/// The service never inspects it; it is cloned onto every event scoped to the owning entity so
/// hosts can route events without a side table.  Downcast with [`client_data_as`].
pub type ClientData = Arc<dyn Any + Send + Sync>;

/// Wrap a value as [`ClientData`].
pub fn client_data<T: Any + Send + Sync>(value: T) -> ClientData {
    Arc::new(value)
}

/// Borrow the payload back as its concrete type, if it is one.
pub fn client_data_as<T: Any + Send + Sync>(data: &ClientData) -> Option<&T> {
    data.downcast_ref::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_any() {
        let data = client_data(42u32);
        assert_eq!(client_data_as::<u32>(&data), Some(&42));
        assert_eq!(client_data_as::<i64>(&data), None);
    }
}

/// A primary-store record that can be mirrored into a vector collection.
///
/// `TYPE_NAME` is the type's registered name (e.g. `"BlogPost"`) and drives
/// the default collection name. `primary_key` must be stable for the life of
/// the record; it becomes the id of the record's embedding payload.
pub trait Entity: Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    fn primary_key(&self) -> String;
}

/// Serial of a layer surface configure event
///
/// Opaque to the client, it is handed back verbatim by `ack_configure`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Serial(pub(crate) u32);

impl From<u32> for Serial {
    #[inline]
    fn from(n: u32) -> Self {
        Serial(n)
    }
}

impl From<Serial> for u32 {
    #[inline]
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

use rivet_core::{BridgeHandle, BridgeResult, InboundSink, NativeRuntime, RawHandle};

/// Native runtime that accepts every call and delivers nothing.
pub(crate) struct NullNative;

impl NativeRuntime for NullNative {
    fn handshake(&self) -> BridgeResult<BridgeHandle> {
        let raw = RawHandle::new(0);
        Ok(BridgeHandle {
            environment: raw,
            runtime: raw,
            client: raw,
        })
    }

    fn send(&self, _: &BridgeHandle, _: &str, _: &[u8]) -> BridgeResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn run_loop(&self, _: &BridgeHandle, _: &dyn InboundSink) -> BridgeResult<()> {
        Ok(())
    }
}

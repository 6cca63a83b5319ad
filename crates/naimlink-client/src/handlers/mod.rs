pub mod nvm;
pub mod outer;

use std::sync::Arc;

use crate::dispatch::Dispatcher;

/// Register every built-in handler on both layers.
pub fn register_builtin(dispatcher: &Dispatcher) {
    dispatcher.register_outer(Arc::new(outer::TunnelFromHost));
    for p in outer::Projection::builtin() {
        dispatcher.register_outer(Arc::new(p));
    }
    for name in outer::Ack::NAMES {
        dispatcher.register_outer(Arc::new(outer::Ack::new(name)));
    }

    dispatcher.register_nvm(Arc::new(nvm::Volume));
    dispatcher.register_nvm(Arc::new(nvm::Preamp));
    dispatcher.register_nvm(Arc::new(nvm::Input));
    dispatcher.register_nvm(Arc::new(nvm::Standby));
    dispatcher.register_nvm(Arc::new(nvm::BufferState));
    dispatcher.register_nvm(Arc::new(nvm::View));
    dispatcher.register_nvm(Arc::new(nvm::BriefNp));
    dispatcher.register_nvm(Arc::new(nvm::Identity));
    dispatcher.register_nvm(Arc::new(nvm::TotalPresets));
    dispatcher.register_nvm(Arc::new(nvm::PresetBlock));
    dispatcher.register_nvm(Arc::new(nvm::TotalInputs));
    dispatcher.register_nvm(Arc::new(nvm::InputBlock));
    dispatcher.register_nvm(Arc::new(nvm::DeviceError));
    dispatcher.register_nvm(Arc::new(nvm::Ack));
}

/// A dispatcher with the built-in vocabulary already registered.
pub fn builtin_dispatcher() -> Dispatcher {
    let d = Dispatcher::new();
    register_builtin(&d);
    d
}

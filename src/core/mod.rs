pub mod event_bus;
pub mod runtime_context;

pub use event_bus::{create_event_channel, EventReceiver, EventSender, HilEvent};
pub use runtime_context::{
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};

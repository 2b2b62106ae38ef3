//! Signal handler installation. Kept in its own test binary because the
//! process-wide handler can only be installed once.

use penplot_core::recovery::SignalAction;
use penplot_core::CrashRecoveryRegistry;

#[test]
fn test_start_stop_restart() {
    let registry = CrashRecoveryRegistry::new();
    assert!(!registry.is_active());

    registry.start().unwrap();
    assert!(registry.is_active());

    registry.stop();
    assert!(!registry.is_active());
    assert_eq!(registry.handle_signal(), SignalAction::ImmediateExit);

    // the handler stays installed; restarting only re-arms it
    registry.start().unwrap();
    assert!(registry.is_active());
    assert_eq!(registry.handle_signal(), SignalAction::Shutdown);
    assert_eq!(registry.handle_signal(), SignalAction::ImmediateExit);
    assert_eq!(registry.handle_signal(), SignalAction::Ignore);
}

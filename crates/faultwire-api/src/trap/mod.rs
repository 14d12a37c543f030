// SNMP trap reception: BER subset decoder and UDP listener.

pub mod ber;
pub mod listener;

pub use ber::{
    PduKind, SNMP_TRAP_OID, SYS_UPTIME_OID, SnmpVersion, TrapPdu, VarBind, VarValue, decode_trap,
};
pub use listener::{DEFAULT_TRAP_PORT, TrapListener, TrapMessage, TrapSettings, check_bind};

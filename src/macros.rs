// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

/// Declares a fixed enum of FSM states together with a `'static` dispatch
/// table of their descriptors, mirroring the boot service's C state-descriptor
/// array: dispatch is a table lookup, never virtual dispatch.
///
/// ```ignore
/// declare_state_table! {
///     pub enum BootState [pub STATE_DESCS => RuntimeState] {
///         Idle       => "Idle",       on_entry: idle_on_entry,    on_exit: None, handler: idle_handler,
///         Init       => "Init",       on_entry: None,             on_exit: None, handler: init_handler,
///     }
/// }
/// ```
#[macro_export]
macro_rules! declare_state_table {
    (
        $enum_vis:vis enum $enum_name:ident [$table_vis:vis $table:ident => $data:ty] {
            $($variant:ident => $name:literal,
                on_entry: $on_entry:expr,
                on_exit: $on_exit:expr,
                handler: $handler:expr, )*
        }
    ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        #[repr(usize)]
        $enum_vis enum $enum_name {
            $($variant, )*
        }

        impl $enum_name {
            pub const COUNT: usize = { let mut n = 0usize; $(let _ = Self::$variant; n += 1;)* n };
        }

        // `$data` names the per-step context type the handlers below operate
        // on (see its definition for why the table itself stays untyped by
        // it: a `'static` array can't carry a per-call borrow lifetime).
        #[allow(dead_code)]
        type _StateTableData = $data;

        $table_vis static $table: &[$crate::fsm::StateDescriptor] = &[
            $(
                $crate::fsm::StateDescriptor {
                    state: $enum_name::$variant,
                    name: $name,
                    on_entry: $on_entry,
                    on_exit: $on_exit,
                    handler: $handler,
                },
            )*
        ];
    }
}

/*!
Command layer: definitions, the registry, argument binding and the
built-in command table.

Directory layout:
  src/cmd/
    mod.rs         (this file)
    definition.rs  (ArgumentDefinition / CommandDefinition, value kinds, flags)
    registry.rs    (RegistryBuilder -> CommandRegistry, alias expansion)
    binder.rs      (tokens -> BoundArgs, ParseError, argument position)
    path.rs        (full_path normalization)
    format.rs      (styling, tables, fixed-width columns, timestamps)
    builtin/       (the commands themselves, grouped by service)

Conventions:
  - Definitions are plain data plus a handler; the registry is immutable
    once built.
  - Binding never talks to the service. Anything that does belongs in a
    handler continuation.
*/

pub mod binder;
pub mod builtin;
pub mod definition;
pub mod format;
pub mod path;
pub mod registry;

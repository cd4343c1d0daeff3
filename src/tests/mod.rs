//! End-to-end tests across discovery, dimension resolution and provisioning.

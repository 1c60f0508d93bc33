//! Parameter collection and single-parameter surfaces.
//!
//! Every operation that takes a parameter handle first checks it was created by
//! the command whose collection is being touched. A parameter taken out of the
//! collection (remove, remove-at, clear, or replaced by a set) is released.

use tracing::debug;

use super::executor::CommandExecutor;
use super::registry::ParameterEntry;
use super::SqlServer;
use crate::ids::{CommandId, ParameterId};
use crate::protocol::{
    ParameterDirection, ProtocolError, ProtocolResult, RemoteSqlParameter, RemoteSqlParameterSet,
};
use crate::value::{DbType, Value};

fn out_of_range(index: usize, count: usize) -> ProtocolError {
    ProtocolError::IndexOutOfRange { index, count }
}

fn already_contained(parameter: ParameterId) -> ProtocolError {
    ProtocolError::invalid_argument(format!("Parameter {parameter} is already contained by this collection"))
}

fn no_such_name(name: &str) -> ProtocolError {
    ProtocolError::invalid_argument(format!("No parameter named '{name}' is contained by this collection"))
}

impl<E: CommandExecutor> SqlServer<E> {
    fn collection(&self, command: CommandId) -> ProtocolResult<Vec<ParameterId>> {
        self.registry.commands.read(command, |entry| entry.parameters.clone())
    }

    /// Position of the first parameter called `name`: exact match first, then
    /// case-insensitive.
    fn position_of_name(&self, command: CommandId, name: &str) -> ProtocolResult<Option<usize>> {
        let names = self
            .collection(command)?
            .into_iter()
            .map(|parameter| self.registry.parameters.read(parameter, |entry| entry.name.clone()))
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(names
            .iter()
            .position(|candidate| candidate == name)
            .or_else(|| names.iter().position(|candidate| candidate.eq_ignore_ascii_case(name))))
    }

    fn release_all(&self, command: CommandId, removed: impl IntoIterator<Item = ParameterId>) {
        for parameter in removed {
            self.registry.release_parameter(command, parameter);
            debug!(command = %command, parameter = %parameter, "Removed parameter");
        }
    }

    fn update_parameter(&self, parameter: ParameterId, f: impl FnOnce(&mut ParameterEntry)) -> ProtocolResult<()> {
        self.registry.parameters.update(parameter, |entry| {
            f(entry);
            Ok(())
        })
    }
}

impl<E: CommandExecutor> RemoteSqlParameterSet for SqlServer<E> {
    fn get_parameter_by_index(&self, command: CommandId, index: usize) -> ProtocolResult<ParameterId> {
        let parameters = self.collection(command)?;
        parameters
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range(index, parameters.len()))
    }

    fn get_parameter_by_name(&self, command: CommandId, name: &str) -> ProtocolResult<ParameterId> {
        let index = self
            .position_of_name(command, name)?
            .ok_or_else(|| no_such_name(name))?;
        self.get_parameter_by_index(command, index)
    }

    fn set_parameter_by_index(&self, command: CommandId, index: usize, parameter: ParameterId) -> ProtocolResult<()> {
        self.registry.ensure_owned(command, parameter)?;
        let replaced = self.registry.commands.update(command, |entry| {
            let count = entry.parameters.len();
            if index >= count {
                return Err(out_of_range(index, count));
            }
            match entry.parameters.iter().position(|p| *p == parameter) {
                Some(existing) if existing != index => Err(already_contained(parameter)),
                _ => Ok(std::mem::replace(&mut entry.parameters[index], parameter)),
            }
        })?;
        if replaced != parameter {
            self.release_all(command, [replaced]);
        }
        Ok(())
    }

    fn set_parameter_by_name(&self, command: CommandId, name: &str, parameter: ParameterId) -> ProtocolResult<()> {
        self.registry.ensure_owned(command, parameter)?;
        let index = self
            .position_of_name(command, name)?
            .ok_or_else(|| no_such_name(name))?;
        self.set_parameter_by_index(command, index, parameter)
    }

    fn get_parameter_count(&self, command: CommandId) -> ProtocolResult<usize> {
        self.registry.commands.read(command, |entry| entry.parameters.len())
    }

    fn add_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<usize> {
        self.registry.ensure_owned(command, parameter)?;
        self.registry.commands.update(command, |entry| {
            if entry.parameters.contains(&parameter) {
                return Err(already_contained(parameter));
            }
            entry.parameters.push(parameter);
            Ok(entry.parameters.len() - 1)
        })
    }

    fn clear_parameters(&self, command: CommandId) -> ProtocolResult<()> {
        let removed = self
            .registry
            .commands
            .update(command, |entry| Ok(std::mem::take(&mut entry.parameters)))?;
        self.release_all(command, removed);
        Ok(())
    }

    fn contains_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<bool> {
        self.registry.ensure_owned(command, parameter)?;
        self.registry
            .commands
            .read(command, |entry| entry.parameters.contains(&parameter))
    }

    fn contains_parameter_name(&self, command: CommandId, name: &str) -> ProtocolResult<bool> {
        Ok(self.position_of_name(command, name)?.is_some())
    }

    fn index_of_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<Option<usize>> {
        self.registry.ensure_owned(command, parameter)?;
        self.registry
            .commands
            .read(command, |entry| entry.parameters.iter().position(|p| *p == parameter))
    }

    fn index_of_parameter_name(&self, command: CommandId, name: &str) -> ProtocolResult<Option<usize>> {
        self.position_of_name(command, name)
    }

    fn insert_parameter(&self, command: CommandId, index: usize, parameter: ParameterId) -> ProtocolResult<()> {
        self.registry.ensure_owned(command, parameter)?;
        self.registry.commands.update(command, |entry| {
            let count = entry.parameters.len();
            if index > count {
                return Err(out_of_range(index, count));
            }
            if entry.parameters.contains(&parameter) {
                return Err(already_contained(parameter));
            }
            entry.parameters.insert(index, parameter);
            Ok(())
        })
    }

    fn remove_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<()> {
        self.registry.ensure_owned(command, parameter)?;
        self.registry.commands.update(command, |entry| {
            let index = entry.parameters.iter().position(|p| *p == parameter).ok_or_else(|| {
                ProtocolError::invalid_argument(format!(
                    "Parameter {parameter} is not contained by this collection"
                ))
            })?;
            entry.parameters.remove(index);
            Ok(())
        })?;
        self.release_all(command, [parameter]);
        Ok(())
    }

    fn remove_parameter_at(&self, command: CommandId, index: usize) -> ProtocolResult<()> {
        let removed = self.registry.commands.update(command, |entry| {
            let count = entry.parameters.len();
            if index >= count {
                return Err(out_of_range(index, count));
            }
            Ok(entry.parameters.remove(index))
        })?;
        self.release_all(command, [removed]);
        Ok(())
    }

    fn remove_parameter_by_name(&self, command: CommandId, name: &str) -> ProtocolResult<()> {
        let index = self
            .position_of_name(command, name)?
            .ok_or_else(|| no_such_name(name))?;
        self.remove_parameter_at(command, index)
    }
}

impl<E: CommandExecutor> RemoteSqlParameter for SqlServer<E> {
    fn get_parameter_name(&self, parameter: ParameterId) -> ProtocolResult<String> {
        self.registry.parameters.read(parameter, |entry| entry.name.clone())
    }

    fn set_parameter_name(&self, parameter: ParameterId, value: &str) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.name = value.to_string())
    }

    fn get_value(&self, parameter: ParameterId) -> ProtocolResult<Value> {
        self.registry.parameters.read(parameter, |entry| entry.value.clone())
    }

    fn set_value(&self, parameter: ParameterId, value: Value) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.value = value)
    }

    fn get_direction(&self, parameter: ParameterId) -> ProtocolResult<ParameterDirection> {
        self.registry.parameters.read(parameter, |entry| entry.direction)
    }

    fn set_direction(&self, parameter: ParameterId, value: ParameterDirection) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.direction = value)
    }

    fn get_db_type(&self, parameter: ParameterId) -> ProtocolResult<DbType> {
        self.registry.parameters.read(parameter, |entry| entry.effective_db_type())
    }

    fn set_db_type(&self, parameter: ParameterId, value: DbType) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.db_type = Some(value))
    }

    fn reset_db_type(&self, parameter: ParameterId) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.db_type = None)
    }

    fn get_is_nullable(&self, parameter: ParameterId) -> ProtocolResult<bool> {
        self.registry.parameters.read(parameter, |entry| entry.is_nullable)
    }

    fn set_is_nullable(&self, parameter: ParameterId, value: bool) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.is_nullable = value)
    }

    fn get_size(&self, parameter: ParameterId) -> ProtocolResult<i32> {
        self.registry.parameters.read(parameter, |entry| entry.size)
    }

    fn set_size(&self, parameter: ParameterId, value: i32) -> ProtocolResult<()> {
        if value < 0 {
            return Err(ProtocolError::invalid_argument(format!(
                "Parameter size must not be negative, got {value}"
            )));
        }
        self.update_parameter(parameter, |entry| entry.size = value)
    }

    fn get_precision(&self, parameter: ParameterId) -> ProtocolResult<u8> {
        self.registry.parameters.read(parameter, |entry| entry.precision)
    }

    fn set_precision(&self, parameter: ParameterId, value: u8) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.precision = value)
    }

    fn get_scale(&self, parameter: ParameterId) -> ProtocolResult<u8> {
        self.registry.parameters.read(parameter, |entry| entry.scale)
    }

    fn set_scale(&self, parameter: ParameterId, value: u8) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.scale = value)
    }

    fn get_source_column(&self, parameter: ParameterId) -> ProtocolResult<String> {
        self.registry.parameters.read(parameter, |entry| entry.source_column.clone())
    }

    fn set_source_column(&self, parameter: ParameterId, value: &str) -> ProtocolResult<()> {
        self.update_parameter(parameter, |entry| entry.source_column = value.to_string())
    }
}
